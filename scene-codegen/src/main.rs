/// Scene XML to instantiation-call generator entry point
mod scene;
mod xml;

use scene::{emit_cpp, emit_pair, extract_instantiations};
use std::env;
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let (path, cpp) = match args.len() {
        2 => (&args[1], false),
        3 if args[2] == "--cpp" => (&args[1], true),
        _ => {
            eprintln!("Usage: {} <scene.xml> [--cpp]", args[0]);
            std::process::exit(1);
        }
    };

    let source = fs::read_to_string(path)?;
    let root = xml::parse_str(&source)?;
    let instantiations = extract_instantiations(&root);

    for inst in &instantiations {
        if cpp {
            println!("{}", emit_cpp(inst));
        } else {
            println!("{}", emit_pair(inst));
        }
    }

    Ok(())
}
