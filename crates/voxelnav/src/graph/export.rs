use std::io::{self, Write};

use super::{NavmeshGraph, to_world};

impl NavmeshGraph {
    /// Writes the graph as a Wavefront OBJ group called `name`.
    ///
    /// Every face references the single dummy texture coordinate, faces are 1-indexed.
    pub fn export_obj(&self, writer: &mut impl Write, name: &str) -> io::Result<()> {
        writeln!(writer, "g {name}")?;
        for vertex in &self.vertices {
            let v = to_world(*vertex);
            writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
        }
        writeln!(writer, "vt 0 0")?;
        for node in self.nodes.values() {
            let [a, b, c] = node.vertices.map(|i| i + 1);
            writeln!(writer, "f {a}/1 {b}/1 {c}/1")?;
        }
        writer.flush()
    }

    /// [`NavmeshGraph::export_obj`] into a string.
    pub fn to_obj_string(&self, name: &str) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.export_obj(&mut buffer, name);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
