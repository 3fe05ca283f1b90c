//! Catalog construction from a local report tree.

use std::path::Path;

use walkdir::WalkDir;

use vigil_core::keys::SEGMENT_COUNT;

use crate::catalog::{Catalog, CatalogBuilder, Location};
use crate::CatalogError;

/// Walks `root` and catalogs every regular file laid out as a snapshot key.
///
/// Files whose path relative to `root` does not have exactly eight segments,
/// or whose name does not decode, are ignored. Directories are never
/// cataloged. Recorded locations are full paths (`root` joined with the
/// relative path).
///
/// # Errors
///
/// Returns [`CatalogError::Walk`] if `root` or any directory below it cannot
/// be read.
pub fn build_from_local_tree(root: &Path) -> Result<Catalog, CatalogError> {
    let mut builder = CatalogBuilder::default();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            builder.skip_malformed(path);
            continue;
        };

        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        match segments {
            Some(segments) if segments.len() == SEGMENT_COUNT => {
                builder.record(&segments.join("/"), Location::File(path.to_path_buf()));
            }
            _ => builder.skip_malformed(path),
        }
    }

    Ok(builder.finish(&root.display().to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use vigil_core::keys::parse_timestamp;
    use vigil_core::ReportKind;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "analysis_time\n").unwrap();
        path
    }

    #[test]
    fn builds_from_report_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let may = touch(
            tmp.path(),
            "customers/C1/reports/aws/111/2021/05/principals.2021-05-30-0750.csv",
        );
        let june = touch(
            tmp.path(),
            "customers/C1/reports/aws/111/2021/06/principals.2021-06-08-0755.csv",
        );

        let catalog = build_from_local_tree(tmp.path()).unwrap();

        let latest = catalog
            .resolve_latest("C1", "111", ReportKind::Principals)
            .unwrap();
        assert_eq!(latest.location, Location::File(june));

        let at = parse_timestamp("2021-05-30-0000").unwrap();
        let as_of = catalog
            .resolve_as_of("C1", "111", at, ReportKind::Principals)
            .unwrap();
        assert_eq!(as_of.location, Location::File(may));
    }

    #[test]
    fn ignores_pollution() {
        let tmp = tempfile::tempdir().unwrap();
        touch(
            tmp.path(),
            "customers/C1/reports/aws/111/2021/05/principals.2021-05-30-0750.csv",
        );
        touch(tmp.path(), "notes.txt");
        touch(tmp.path(), "customers/C1/reports/aws/111/2021/05/.DS_Store");
        touch(
            tmp.path(),
            "customers/C1/reports/aws/111/2021/05/extra/principals.2021-05-30-0750.csv",
        );
        touch(
            tmp.path(),
            "customers/C1/reports/aws/111/2021/05/principals.yesterday.csv",
        );
        // A directory that happens to look like a report file.
        fs::create_dir_all(
            tmp.path()
                .join("customers/C1/reports/aws/111/2021/05/resources.2021-05-30-0750.csv"),
        )
        .unwrap();

        let catalog = build_from_local_tree(tmp.path()).unwrap();
        assert_eq!(catalog.statistics().snapshots, 1);
        assert!(catalog
            .resolve_latest("C1", "111", ReportKind::Resources)
            .is_none());
    }

    #[test]
    fn missing_root_is_a_build_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = build_from_local_tree(&tmp.path().join("does-not-exist"));
        assert!(matches!(result, Err(CatalogError::Walk(_))));
    }

    #[test]
    fn empty_tree_builds_empty_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = build_from_local_tree(tmp.path()).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.statistics().customers, 0);
    }
}
