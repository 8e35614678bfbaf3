use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

use super::functions::FunctionTable;

/// Mode requested for new output files, before the umask applies.
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o666;

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub verbose: bool,
    pub dry_run: bool,
    pub target_dir: Option<PathBuf>,
}

/// Loads the template at `path` and evaluates it against `table`.
pub fn execute_template(
    path: &Path,
    table: &FunctionTable,
    verbose: bool,
) -> anyhow::Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))?;

    let rendered = table
        .render(&text)
        .with_context(|| format!("failed to render template {}", path.display()))?;

    if verbose {
        println!("{}", rendered);
    }

    Ok(rendered)
}

fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(NEW_FILE_MODE));
    }
    builder.tempfile_in(dir)
}

/// Replaces the content of `path` atomically. An existing file keeps its
/// permissions; a new one gets the same mode `fs::write` would give it.
pub fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = temp_file_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    file.write_all(content.as_bytes())?;

    if let Ok(metadata) = fs::metadata(path) {
        file.as_file().set_permissions(metadata.permissions())?;
    }

    file.persist(path)
        .map_err(|e| anyhow!(e.error))
        .with_context(|| format!("failed to write file {}", path.display()))?;

    Ok(())
}

/// Writes `content` to `target_dir/file_name`, creating the directory first.
pub fn write_file_to_dir(
    file_name: &Path,
    target_dir: &Path,
    content: &str,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(target_dir)
        .with_context(|| format!("failed to create directory {}", target_dir.display()))?;

    let target = target_dir.join(file_name);
    write_file(&target, content)?;
    Ok(target)
}

/// Renders each file in turn and writes the result, stopping at the first
/// failure. A file whose render fails is never written.
pub fn render_files(
    files: &[PathBuf],
    table: &FunctionTable,
    options: &RenderOptions,
) -> anyhow::Result<()> {
    for path in files {
        debug!(file = %path.display(), "Rendering template");
        let content = execute_template(path, table, options.verbose)?;

        if options.dry_run {
            info!(file = %path.display(), "Dry run, not writing output");
            continue;
        }

        let written = match &options.target_dir {
            Some(target_dir) => {
                let file_name = path
                    .file_name()
                    .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
                write_file_to_dir(Path::new(file_name), target_dir, &content)?
            }
            None => {
                write_file(path, &content)?;
                path.clone()
            }
        };

        info!(file = %path.display(), output = %written.display(), "Rendered template");
    }

    Ok(())
}
