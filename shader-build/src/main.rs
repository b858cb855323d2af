/// Incremental shader build driver entry point.
///
/// Compiles the project's shader list to SPIR-V with glslangValidator,
/// skipping sources whose timestamps match the caches from the last
/// successful run. Touching a shared include invalidates everything.
mod cache;
mod runner;

use cache::{TimestampCache, mtime_seconds};
use constants::shaders::{
    GLSLANG_DEFAULT, GLSLANG_ENV, INCLUDE_CACHE_FILE, SHADER_COMPILE_LIST, SHARED_INCLUDES,
    SOURCE_CACHE_FILE,
};
use runner::{BuildError, RESET, YELLOW, compile_shader, print_error, print_success};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let args: Vec<String> = env::args().collect();
    let (command, shader_root) = match args.len() {
        1 => ("build".to_string(), PathBuf::from(".")),
        2 => (args[1].clone(), PathBuf::from(".")),
        3 => (args[1].clone(), PathBuf::from(&args[2])),
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    let result = match command.as_str() {
        "build" => build(&shader_root),
        "status" => status(&shader_root),
        "clean" => clean(&shader_root),
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        print_error(&format!("{}", e));
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [build|status|clean] [shader-root]", program);
    eprintln!("  build   compile stale shaders (default)");
    eprintln!("  status  list stale shaders without compiling");
    eprintln!("  clean   drop both timestamp caches");
}

/// Compiler binary from the environment, falling back to PATH lookup.
fn resolve_compiler() -> String {
    env::var(GLSLANG_ENV).unwrap_or_else(|_| GLSLANG_DEFAULT.to_string())
}

/// Why an entry needs recompiling, if it does.
enum Staleness {
    Fresh,
    SourceChanged,
    OutputMissing,
    IncludeChanged,
}

struct BuildPlan {
    source_cache: TimestampCache,
    include_cache: TimestampCache,
    /// Current mtimes of the shared includes that exist on disk.
    include_times: Vec<(String, u64)>,
    includes_changed: bool,
}

impl BuildPlan {
    fn scan(root: &Path) -> Self {
        let source_cache = TimestampCache::load(&root.join(SOURCE_CACHE_FILE));
        let include_cache = TimestampCache::load(&root.join(INCLUDE_CACHE_FILE));

        let mut include_times = Vec::new();
        let mut includes_changed = false;
        for include in SHARED_INCLUDES {
            match mtime_seconds(&root.join(include)) {
                Ok(mtime) => {
                    if include_cache.is_stale(include, mtime) {
                        includes_changed = true;
                    }
                    include_times.push((include.to_string(), mtime));
                }
                // A header absent on disk cannot gate the build; it only
                // counts as a change if the cache still remembers it.
                Err(_) => {
                    if include_cache.entries.contains_key(*include) {
                        includes_changed = true;
                    }
                }
            }
        }

        Self {
            source_cache,
            include_cache,
            include_times,
            includes_changed,
        }
    }

    fn staleness(&self, root: &Path, source: &str, output: &str) -> Staleness {
        if self.includes_changed {
            return Staleness::IncludeChanged;
        }
        if !root.join(output).exists() {
            return Staleness::OutputMissing;
        }
        match mtime_seconds(&root.join(source)) {
            Ok(mtime) if !self.source_cache.is_stale(source, mtime) => Staleness::Fresh,
            // Missing sources surface as errors at compile time; treat as
            // stale here so `status` flags them.
            _ => Staleness::SourceChanged,
        }
    }
}

fn status(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let plan = BuildPlan::scan(root);
    let mut stale = 0;

    for entry in SHADER_COMPILE_LIST {
        let reason = match plan.staleness(root, entry.source, entry.output) {
            Staleness::Fresh => {
                println!("  up to date  {}", entry.source);
                continue;
            }
            Staleness::SourceChanged => "source changed",
            Staleness::OutputMissing => "output missing",
            Staleness::IncludeChanged => "shared include changed",
        };
        println!("  {}stale{}       {} ({})", YELLOW, RESET, entry.source, reason);
        stale += 1;
    }

    println!(
        "{} of {} shaders need recompiling",
        stale,
        SHADER_COMPILE_LIST.len()
    );
    Ok(())
}

fn build(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let compiler = resolve_compiler();
    let mut plan = BuildPlan::scan(root);

    let mut compiled = 0;
    let mut skipped = 0;
    let mut failures: Vec<BuildError> = Vec::new();

    for entry in SHADER_COMPILE_LIST {
        if matches!(
            plan.staleness(root, entry.source, entry.output),
            Staleness::Fresh
        ) {
            skipped += 1;
            continue;
        }

        let source = root.join(entry.source);
        let output = root.join(entry.output);
        // Snapshot the mtime before compiling so an edit made while the
        // compiler runs still marks the source stale next time.
        let mtime = mtime_seconds(&source).ok();
        match compile_shader(&compiler, &source, &output) {
            Ok(_) => {
                if let Some(mtime) = mtime {
                    plan.source_cache.record(entry.source, mtime);
                }
                compiled += 1;
            }
            Err(e @ BuildError::CompilerLaunch { .. }) => {
                // Nothing else can succeed without a compiler.
                return Err(e.into());
            }
            Err(e) => {
                print_error(&format!("{}", e));
                failures.push(e);
            }
        }
    }

    plan.source_cache.save(&root.join(SOURCE_CACHE_FILE))?;

    // The include cache only advances once every stale shader went through,
    // otherwise a failed shader would never see the include change again.
    if failures.is_empty() {
        let mut include_cache = TimestampCache::default();
        for (include, mtime) in &plan.include_times {
            include_cache.record(include, *mtime);
        }
        plan.include_cache = include_cache;
        plan.include_cache.save(&root.join(INCLUDE_CACHE_FILE))?;
    }

    println!(
        "{} compiled, {} up to date, {} failed",
        compiled,
        skipped,
        failures.len()
    );

    if failures.is_empty() {
        print_success("shader build complete");
        Ok(())
    } else {
        Err(format!("{} shader(s) failed to compile", failures.len()).into())
    }
}

fn clean(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    for cache in [SOURCE_CACHE_FILE, INCLUDE_CACHE_FILE] {
        let path = root.join(cache);
        if path.exists() {
            fs::remove_file(&path)?;
            println!("Removed {}", path.display());
        }
    }
    print_success("caches cleared, next build recompiles everything");
    Ok(())
}
