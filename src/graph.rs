use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::Command;

use crate::error::AppError;

/// An undirected Graphviz document built up statement by statement.
/// The crate's contract ends at the DOT text; layout is Graphviz's job.
pub struct DotGraph {
    name: String,
    graph_attrs: Vec<(String, String)>,
    node_defaults: Vec<(String, String)>,
    subgraphs: Vec<Subgraph>,
    nodes: Vec<Node>,
    edges: Vec<EdgeStmt>,
}

/// A named subgraph; `cluster_` prefixed names get their own border in
/// most Graphviz engines.
pub struct Subgraph {
    name: String,
    attrs: Vec<(String, String)>,
    nodes: Vec<Node>,
}

struct Node {
    id: String,
    attrs: Vec<(String, String)>,
}

struct EdgeStmt {
    a: String,
    b: String,
    attrs: Vec<(String, String)>,
}

impl Subgraph {
    pub fn attr(&mut self, key: &str, value: &str) {
        self.attrs.push((key.to_string(), value.to_string()));
    }

    pub fn node(&mut self, id: &str, attrs: Vec<(String, String)>) {
        self.nodes.push(Node {
            id: id.to_string(),
            attrs,
        });
    }
}

impl DotGraph {
    pub fn new(name: &str) -> Self {
        DotGraph {
            name: name.to_string(),
            graph_attrs: Vec::new(),
            node_defaults: Vec::new(),
            subgraphs: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Graph-level attribute, e.g. the layout engine hint
    pub fn graph_attr(&mut self, key: &str, value: &str) {
        self.graph_attrs.push((key.to_string(), value.to_string()));
    }

    /// Default attribute applied to every node
    pub fn node_default(&mut self, key: &str, value: &str) {
        self.node_defaults.push((key.to_string(), value.to_string()));
    }

    /// Append a subgraph and hand it out for population
    pub fn subgraph(&mut self, name: &str) -> &mut Subgraph {
        self.subgraphs.push(Subgraph {
            name: name.to_string(),
            attrs: Vec::new(),
            nodes: Vec::new(),
        });
        let last = self.subgraphs.len() - 1;
        &mut self.subgraphs[last]
    }

    /// Top-level node outside any subgraph
    pub fn node(&mut self, id: &str, attrs: Vec<(String, String)>) {
        self.nodes.push(Node {
            id: id.to_string(),
            attrs,
        });
    }

    /// Undirected edge between two node ids
    pub fn edge(&mut self, a: &str, b: &str, attrs: Vec<(String, String)>) {
        self.edges.push(EdgeStmt {
            a: a.to_string(),
            b: b.to_string(),
            attrs,
        });
    }

    /// Serialize the whole document as DOT text.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("graph {} {{\n", quote(&self.name)));
        if !self.graph_attrs.is_empty() {
            out.push_str(&format!("    graph [{}];\n", attr_list(&self.graph_attrs)));
        }
        if !self.node_defaults.is_empty() {
            out.push_str(&format!("    node [{}];\n", attr_list(&self.node_defaults)));
        }
        for subgraph in &self.subgraphs {
            out.push_str(&format!("    subgraph {} {{\n", quote(&subgraph.name)));
            for (key, value) in &subgraph.attrs {
                out.push_str(&format!("        {}={};\n", quote(key), quote(value)));
            }
            for node in &subgraph.nodes {
                out.push_str(&format!(
                    "        {} [{}];\n",
                    quote(&node.id),
                    attr_list(&node.attrs)
                ));
            }
            out.push_str("    }\n");
        }
        for node in &self.nodes {
            out.push_str(&format!(
                "    {} [{}];\n",
                quote(&node.id),
                attr_list(&node.attrs)
            ));
        }
        for edge in &self.edges {
            if edge.attrs.is_empty() {
                out.push_str(&format!("    {} -- {};\n", quote(&edge.a), quote(&edge.b)));
            } else {
                out.push_str(&format!(
                    "    {} -- {} [{}];\n",
                    quote(&edge.a),
                    quote(&edge.b),
                    attr_list(&edge.attrs)
                ));
            }
        }
        out.push_str("}\n");
        out
    }

    /// Write the DOT document to `<base>.gv` and return the path.
    pub fn save(&self, base: &str) -> Result<PathBuf, AppError> {
        let path = PathBuf::from(format!("{}.gv", base));
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(self.to_dot().as_bytes())?;
        writer.flush()?;
        Ok(path)
    }

    /// Run an external Graphviz engine over the saved DOT document,
    /// producing `<base>.<format>`. The document must have been saved
    /// first; a missing engine or a nonzero exit is reported as a
    /// rendering failure.
    pub fn render(&self, base: &str, engine: &str, format: &str) -> Result<PathBuf, AppError> {
        let dot_path = format!("{}.gv", base);
        let out_path = format!("{}.{}", base, format);
        let status = Command::new(engine)
            .arg(format!("-T{}", format))
            .arg("-o")
            .arg(&out_path)
            .arg(&dot_path)
            .status()
            .map_err(|e| AppError::RenderFailed {
                engine: engine.to_string(),
                status: e.to_string(),
            })?;
        if !status.success() {
            return Err(AppError::RenderFailed {
                engine: engine.to_string(),
                status: status.to_string(),
            });
        }
        Ok(PathBuf::from(out_path))
    }
}

fn attr_list(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(key, value)| format!("{}={}", quote(key), quote(value)))
        .collect::<Vec<String>>()
        .join(", ")
}

// Case-independent DOT keywords; unquoted in id position they parse as
// statements (`edge [..];` sets edge defaults instead of naming a node).
const DOT_KEYWORDS: [&str; 6] = ["node", "edge", "graph", "digraph", "subgraph", "strict"];

fn is_bare(s: &str) -> bool {
    if DOT_KEYWORDS.iter().any(|kw| s.eq_ignore_ascii_case(kw)) {
        return false;
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote an identifier or attribute value unless it is a bare DOT ident.
fn quote(s: &str) -> String {
    if is_bare(s) {
        s.to_string()
    } else {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    }
}
