use clap::Args;
use serde_json::{json, Value};

use crate::cli::Result;
use crate::tree::FileStatNode;
use crate::workspace::{ResolveOptions, Workspace};

/// Arguments for the `ls` command.
#[derive(Args, Debug)]
pub struct LsArgs {
    /// The resource identifier to list.
    pub uri: String,

    /// Expand single-entry directory chains.
    #[arg(long)]
    pub deep: bool,
}

pub async fn run(workspace: &Workspace, args: &LsArgs, json: bool) -> Result<()> {
    let options = ResolveOptions {
        resolve_fully: args.deep,
        ..Default::default()
    };
    let node = workspace.resolve(&args.uri, &options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&node_json(&node))?);
    } else if node.is_directory {
        print_children(&node, 0);
    } else {
        println!("{}", node.name);
    }
    Ok(())
}

fn print_children(node: &FileStatNode, depth: usize) {
    let Some(children) = &node.children else {
        return;
    };
    for child in children {
        let indent = "  ".repeat(depth);
        if child.is_directory {
            println!("{}{}/", indent, child.name);
            print_children(child, depth + 1);
        } else {
            println!("{}{}", indent, child.name);
        }
    }
}

fn node_json(node: &FileStatNode) -> Value {
    let mut value = json!({
        "resource": node.resource.to_string(),
        "name": node.name,
        "directory": node.is_directory,
        "has_children": node.has_children,
    });
    if let Some(children) = &node.children {
        value["children"] = Value::Array(children.iter().map(node_json).collect());
    }
    value
}
