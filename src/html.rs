use crate::report::Report;
use log::{error, info};
use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>rtcheck lock graph</title>
<style>
body { display: flex; font-family: sans-serif; margin: 0; }
#graph { flex: 1; overflow: auto; }
#panel { width: 28em; border-left: 1px solid #ccc; padding: 0 1em; overflow: auto; height: 100vh; }
#panel .cycle { color: #b00; }
#panel pre { font-size: 80%; white-space: pre-wrap; }
</style>
</head>
<body>
<div id="graph">{{SVG}}</div>
<div id="panel"><h2>Lock order edges</h2><div id="edges"></div></div>
<script>
const edges = {{DATA}};
const panel = document.getElementById("edges");
for (const edge of edges) {
    const details = document.createElement("details");
    const summary = document.createElement("summary");
    summary.textContent = edge.from + " → " + edge.to +
        " (" + edge.witnesses.length + ")";
    if (edge.on_cycle) summary.className = "cycle";
    details.appendChild(summary);
    for (const witness of edge.witnesses) {
        const pre = document.createElement("pre");
        pre.textContent = witness.from_stack.concat(witness.to_stack).join("\n");
        details.appendChild(pre);
    }
    panel.appendChild(details);
}
</script>
</body>
</html>
"#;

/// Expands the report template around the SVG produced by the external
/// `dot` tool. A missing or failing `dot` is logged and skipped; it
/// never fails the run.
pub fn write_html(dir: &Path, report: &Report) -> io::Result<()> {
    let svg = match render_svg(&report.render_dot()) {
        Ok(svg) => svg,
        Err(err) => {
            error!("cannot render SVG (is graphviz installed?): {err}");
            return Ok(());
        }
    };

    let page = TEMPLATE
        .replace("{{SVG}}", &svg)
        .replace("{{DATA}}", &report.witnesses_json());

    fs::create_dir_all(dir)?;
    let path = dir.join("index.html");
    fs::write(&path, page)?;
    info!("wrote HTML report to {}", path.display());

    Ok(())
}

/// Runs `dot -Tsvg` over the graph description.
fn render_svg(dot: &str) -> io::Result<String> {
    let mut child = Command::new("dot")
        .arg("-Tsvg")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(dot.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("dot exited with {}", output.status),
        ));
    }

    String::from_utf8(output.stdout)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "dot produced invalid UTF-8"))
}
