//! Font loading for report documents.
//!
//! `genpdf` needs TrueType files for text metrics. A family is looked up in the
//! configured directory, `$REPORT_FONTS_DIR`, `assets/fonts` next to the
//! executable and `assets/fonts` in the crate root (Roboto), falling back to a
//! system Liberation Sans installation.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{self, FontData, FontFamily};
use log::warn;

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Environment variable overriding the font directory.
pub const FONTS_DIR_ENV: &str = "REPORT_FONTS_DIR";

/// Environment variable overriding the system fallback directory.
pub const SYSTEM_FONTS_DIR_ENV: &str = "REPORT_SYSTEM_FONTS_DIR";

const SYSTEM_FALLBACK_FAMILY_NAME: &str = "LiberationSans";

const SYSTEM_FALLBACK_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/liberation2",
    "/usr/share/fonts/liberation-sans",
    "/usr/share/fonts/liberation",
];

const STYLE_SUFFIXES: &[&str] = &["Regular", "Bold", "Italic", "BoldItalic"];

fn family_files(family: &str) -> Vec<String> {
    STYLE_SUFFIXES
        .iter()
        .map(|suffix| format!("{}-{}.ttf", family, suffix))
        .collect()
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

fn font_directory_candidates(preferred: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    let mut push = |candidate: PathBuf| {
        if !candidates.iter().any(|existing| existing == &candidate) {
            candidates.push(candidate);
        }
    };

    if let Some(path) = preferred {
        push(path.to_path_buf());
    }
    if let Some(path) = env_path(FONTS_DIR_ENV) {
        push(path);
    }
    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            push(bin_dir.join("assets/fonts"));
        }
    }
    push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts"));

    candidates
}

fn missing_font_files(path: &Path, family: &str) -> Vec<String> {
    family_files(family)
        .into_iter()
        .filter(|name| !path.join(name).is_file())
        .collect()
}

fn resolve_font_directory(preferred: Option<&Path>) -> Result<PathBuf, Error> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates(preferred) {
        let exists = candidate.is_dir();
        let missing = missing_font_files(&candidate, DEFAULT_FONT_FAMILY_NAME);

        if exists && missing.is_empty() {
            return Ok(candidate);
        }

        let reason = if !exists {
            format!("directory missing at {}", candidate.display())
        } else {
            format!("missing files [{}]", missing.join(", "))
        };
        attempts.push(format!("{} ({})", candidate.display(), reason));
    }

    let summary = if attempts.is_empty() {
        "no search paths were available".to_owned()
    } else {
        attempts.join(", ")
    };

    Err(Error::new(
        format!(
            "Unable to locate the {} font family. Checked: {}. Set {} to a directory containing {}.",
            DEFAULT_FONT_FAMILY_NAME,
            summary,
            FONTS_DIR_ENV,
            family_files(DEFAULT_FONT_FAMILY_NAME).join(", ")
        ),
        io::Error::new(io::ErrorKind::NotFound, "report fonts directory not found"),
    ))
}

fn load_family(directory: &Path, family: &str) -> Result<FontFamily<FontData>, Error> {
    fonts::from_files(directory, family, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load font family '{}' from {}: {}",
                family,
                directory.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

fn system_font_directory() -> Option<PathBuf> {
    if let Some(path) = env_path(SYSTEM_FONTS_DIR_ENV) {
        return Some(path);
    }

    SYSTEM_FALLBACK_DIRS
        .iter()
        .map(PathBuf::from)
        .find(|dir| missing_font_files(dir, SYSTEM_FALLBACK_FAMILY_NAME).is_empty())
}

fn system_fallback_font_family() -> Result<FontFamily<FontData>, Error> {
    let directory = system_font_directory().ok_or_else(|| {
        Error::new(
            "No system Liberation Sans installation found for fallback",
            io::Error::new(io::ErrorKind::NotFound, "system fonts directory not found"),
        )
    })?;
    load_family(&directory, SYSTEM_FALLBACK_FAMILY_NAME)
}

fn fonts_missing(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

/// Returns the Roboto family from the first usable search directory, or the
/// system Liberation Sans family when no Roboto files are found.
pub fn font_family(preferred: Option<&Path>) -> Result<FontFamily<FontData>, Error> {
    let bundled = resolve_font_directory(preferred)
        .and_then(|directory| load_family(&directory, DEFAULT_FONT_FAMILY_NAME));

    match bundled {
        Ok(family) => Ok(family),
        Err(err) if fonts_missing(&err) => match system_fallback_font_family() {
            Ok(fallback) => {
                warn!(
                    "Report fonts unavailable ({}); falling back to '{}'.",
                    err, SYSTEM_FALLBACK_FAMILY_NAME
                );
                Ok(fallback)
            }
            Err(fallback_err) => Err(Error::new(
                format!(
                    "Report fonts unavailable and system fallback failed: {}",
                    fallback_err
                ),
                io::Error::new(io::ErrorKind::NotFound, "report fonts are not available"),
            )),
        },
        Err(err) => Err(err),
    }
}

/// Indicates whether [`font_family`] can find a complete family.
pub fn fonts_available(preferred: Option<&Path>) -> bool {
    resolve_font_directory(preferred).is_ok() || system_font_directory().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_files_follow_genpdf_naming() {
        assert_eq!(
            family_files("Roboto"),
            vec![
                "Roboto-Regular.ttf",
                "Roboto-Bold.ttf",
                "Roboto-Italic.ttf",
                "Roboto-BoldItalic.ttf"
            ]
        );
    }

    #[test]
    fn preferred_directory_is_searched_first() {
        let preferred = PathBuf::from("/opt/report-fonts");
        let candidates = font_directory_candidates(Some(&preferred));
        assert_eq!(candidates.first(), Some(&preferred));
    }

    #[test]
    fn missing_directory_is_reported_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_font_directory(Some(dir.path()));
        // Other candidates may exist on the machine running the tests.
        if let Err(err) = err {
            assert!(fonts_missing(&err));
            assert!(err.to_string().contains(&dir.path().display().to_string()));
        }
    }
}
