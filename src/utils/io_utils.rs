use crate::utils::Result;
use std::path::Path;

/// Joins an output prefix and suffix into `<prefix>.<suffix>`.
pub fn output_path(output_prefix: &str, output_suffix: &str) -> String {
    format!("{}.{}", output_prefix, output_suffix)
}

pub fn create_writer<T, F>(output_prefix: &str, output_suffix: &str, f: F) -> Result<T>
where
    F: FnOnce(&str) -> Result<T>,
{
    let output_path = output_path(output_prefix, output_suffix);
    if let Some(parent) = Path::new(&output_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(format!(
                "Output directory does not exist: {}",
                parent.display()
            ));
        }
    }
    f(&output_path)
}
