/// Shape extraction and code emission for the scene manager.
use crate::xml::Element;

/// One mesh/material pairing the renderer instantiates.
#[derive(Debug, Clone, PartialEq)]
pub struct Instantiation {
    pub mesh: String,
    pub material: String,
}

/// Collect the instantiations of every top-level `<shape>` element.
///
/// A shape contributes when its first `<string>` child carries a `value`
/// attribute (the mesh name) and its first `<ref>` child carries an `id`
/// attribute (the material). Shapes missing either are skipped; the scene
/// files also describe emitters and sensors under the same root.
pub fn extract_instantiations(root: &Element) -> Vec<Instantiation> {
    root.children
        .iter()
        .filter(|child| child.tag == "shape")
        .filter_map(|shape| {
            let mesh = shape.find_child("string", 0)?.attr("value")?;
            let material = shape.find_child("ref", 0)?.attr("id")?;
            Some(Instantiation {
                mesh: mesh.to_string(),
                material: material.to_string(),
            })
        })
        .collect()
}

/// Render one instantiation as a bare `mesh material` pair.
pub fn emit_pair(inst: &Instantiation) -> String {
    format!("{} {}", inst.mesh, inst.material)
}

/// Render one instantiation as the scene-manager call pasted into C++.
pub fn emit_cpp(inst: &Instantiation) -> String {
    format!("scene.addMesh(\"{}\", \"{}\");", inst.mesh, inst.material)
}
