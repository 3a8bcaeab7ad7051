use std::fs;
use std::path::Path;
use tera::{Context, Tera};

use crate::error::{EzmailError, Result};

/// Renders an `.html` template file with the given variables.
pub fn render_template(file: &Path, context: &Context) -> Result<String> {
    if !file.is_file() {
        return Err(EzmailError::NotFound(file.to_path_buf()));
    }
    if file.extension().and_then(|e| e.to_str()) != Some("html") {
        return Err(EzmailError::InvalidInput(format!(
            "template {} must have a .html extension",
            file.display()
        )));
    }

    let source = fs::read_to_string(file)?;
    Tera::one_off(&source, context, false).map_err(|e| EzmailError::Template(e.to_string()))
}
