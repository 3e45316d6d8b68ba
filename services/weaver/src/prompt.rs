//! Stdin prompting for the interactive loop.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use weave_client::MapClient;

/// Read one trimmed line; `None` on EOF.
pub fn read_line(prompt: &str) -> Result<Option<String>> {
    println!();
    println!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Ask the user to pick one of `options`. A single option is chosen
/// automatically; an empty list yields the fallback.
fn select(label: &str, options: &[String], fallback: &str) -> Result<String> {
    match options.len() {
        0 => {
            println!("No {label} advertised; using \"{fallback}\".");
            Ok(fallback.to_string())
        }
        1 => {
            println!("Using the only {label}: {}", options[0]);
            Ok(options[0].clone())
        }
        _ => {
            println!();
            println!("Available {label}s:");
            for option in options {
                println!("  {option}");
            }
            loop {
                let Some(answer) = read_line(&format!("Choose a {label}:"))? else {
                    anyhow::bail!("stdin closed while choosing a {label}");
                };
                if options.contains(&answer) {
                    return Ok(answer);
                }
                println!("\"{answer}\" is not in the list.");
            }
        }
    }
}

/// What the user picked for one map request.
pub struct MapChoice {
    pub layer_title: String,
    pub tile_matrix_set: String,
    pub format: String,
    pub style: String,
}

/// Walk the layer tree to a leaf, then pick matrix set, format and style.
pub fn choose_map(client: &MapClient) -> Result<Option<MapChoice>> {
    let mut titles = client.root_layer_titles()?;
    if titles.is_empty() {
        return Ok(None);
    }

    // Descend until the chosen layer has no children.
    let mut layer_title = String::new();
    while !titles.is_empty() {
        layer_title = select("layer", &titles, "")?;
        titles = client.children_layer_titles(&layer_title)?;
    }

    let tile_matrix_set = if client.is_wmts_layer(&layer_title)? {
        let sets = client.layer_tile_matrix_sets(&layer_title)?;
        if sets.is_empty() {
            println!("The layer links no tile matrix set.");
            return Ok(None);
        }
        select("tile matrix set", &sets, "")?
    } else {
        String::new()
    };

    let formats = client.layer_formats(&layer_title)?;
    let format = select("format", &formats, "image/png")?;

    let styles = client.layer_styles(&layer_title)?;
    let style = select("style", &styles, "")?;

    Ok(Some(MapChoice {
        layer_title,
        tile_matrix_set,
        format,
        style,
    }))
}
