//! Catalog construction from an object-store listing.

use tracing::debug;

use vigil_core::keys::customer_prefix;

use crate::catalog::{Catalog, CatalogBuilder, Location};
use crate::store::{self, ListPage, ObjectStore, StoreError};
use crate::CatalogError;

/// Prefix shared by every snapshot key.
pub const REPORTS_PREFIX: &str = "customers/";

// ---------------------------------------------------------------------------
// KindSelector
// ---------------------------------------------------------------------------

/// Key suffixes an object must end with to be cataloged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSelector {
    suffixes: Vec<String>,
}

impl KindSelector {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Selects the CSV reports only.
    #[must_use]
    pub fn csv_reports() -> Self {
        Self::new([".csv"])
    }

    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.suffixes.iter().any(|s| key.ends_with(s.as_str()))
    }
}

impl Default for KindSelector {
    fn default() -> Self {
        Self::csv_reports()
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Catalogs every key of a paged listing that passes `selector`.
///
/// # Errors
///
/// Returns [`CatalogError::Listing`] as soon as a page fails; the partially
/// built catalog is discarded.
pub fn build_from_object_listing<I>(pages: I, selector: &KindSelector) -> Result<Catalog, CatalogError>
where
    I: IntoIterator<Item = Result<ListPage, StoreError>>,
{
    let mut builder = CatalogBuilder::default();
    let mut page_count = 0usize;

    for page in pages {
        let page = page?;
        page_count += 1;
        for key in page.keys {
            if !selector.matches(&key) {
                builder.skip_filtered(&key);
                continue;
            }
            let location = Location::Object(key.clone());
            builder.record(&key, location);
        }
    }

    debug!(pages = page_count, "object listing consumed");
    Ok(builder.finish("object listing"))
}

impl Catalog {
    /// Lists `prefix` in `store` page by page and catalogs the result.
    ///
    /// # Errors
    ///
    /// See [`build_from_object_listing`].
    pub fn from_store(
        store: &dyn ObjectStore,
        prefix: &str,
        selector: &KindSelector,
    ) -> Result<Catalog, CatalogError> {
        build_from_object_listing(store::pages(store, prefix), selector)
    }

    /// Catalogs the reports of one customer only.
    ///
    /// # Errors
    ///
    /// See [`build_from_object_listing`].
    pub fn from_store_for_customer(
        store: &dyn ObjectStore,
        customer_id: &str,
        selector: &KindSelector,
    ) -> Result<Catalog, CatalogError> {
        Self::from_store(store, &customer_prefix(customer_id), selector)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use vigil_core::keys::parse_timestamp;
    use vigil_core::ReportKind;

    const MAY: &str = "customers/C1/reports/aws/111/2021/05/principals.2021-05-30-0750.csv";
    const JUNE: &str = "customers/C1/reports/aws/111/2021/06/principals.2021-06-08-0755.csv";

    fn page(keys: &[&str], continuation: Option<&str>) -> Result<ListPage, StoreError> {
        Ok(ListPage {
            keys: keys.iter().map(|k| (*k).to_string()).collect(),
            continuation: continuation.map(str::to_string),
        })
    }

    #[test]
    fn scenario_latest_and_as_of() {
        let pages = vec![page(&[MAY], Some(MAY)), page(&[JUNE], None)];
        let catalog = build_from_object_listing(pages, &KindSelector::csv_reports()).unwrap();

        let latest = catalog
            .resolve_latest("C1", "111", ReportKind::Principals)
            .unwrap();
        assert_eq!(latest.location, Location::Object(JUNE.to_string()));

        let may = catalog
            .resolve_as_of(
                "C1",
                "111",
                parse_timestamp("2021-05-30-0000").unwrap(),
                ReportKind::Principals,
            )
            .unwrap();
        assert_eq!(may.location, Location::Object(MAY.to_string()));

        assert!(catalog
            .resolve_as_of(
                "C1",
                "111",
                parse_timestamp("2021-05-31-0000").unwrap(),
                ReportKind::Principals,
            )
            .is_none());
    }

    #[test]
    fn selector_filters_before_decoding() {
        let xlsx = "customers/C1/reports/aws/111/2021/05/resource-access-audit.2021-05-30-0750.xlsx";
        let pages = || vec![page(&[MAY, xlsx], None)];

        let csv_only = build_from_object_listing(pages(), &KindSelector::csv_reports()).unwrap();
        assert_eq!(csv_only.statistics().snapshots, 1);

        let both =
            build_from_object_listing(pages(), &KindSelector::new([".csv", ".xlsx"])).unwrap();
        assert_eq!(both.statistics().snapshots, 2);
        assert_eq!(both.all_locations("C1", "111").len(), 2);
    }

    #[test]
    fn latest_alias_is_excluded() {
        let alias = "customers/C1/reports/aws/111/2021/latest/principals.2021-06-08-0755.csv";
        let pages = vec![page(&[MAY, alias], None)];
        let catalog = build_from_object_listing(pages, &KindSelector::default()).unwrap();
        assert_eq!(catalog.statistics().snapshots, 1);
    }

    #[test]
    fn page_error_aborts_build() {
        let pages = vec![
            page(&[MAY], Some(MAY)),
            Err(StoreError::Backend("access denied".into())),
        ];
        let result = build_from_object_listing(pages, &KindSelector::default());
        assert!(matches!(result, Err(CatalogError::Listing(_))));
    }

    #[test]
    fn from_store_follows_continuations() {
        let mut store = MemoryObjectStore::new().with_page_size(1);
        store.insert(MAY, "a");
        store.insert(JUNE, "b");
        store.insert(
            "customers/C2/reports/aws/222/2021/06/resources.2021-06-08-0755.csv",
            "c",
        );

        let all = Catalog::from_store(&store, REPORTS_PREFIX, &KindSelector::default()).unwrap();
        assert_eq!(all.statistics().customers, 2);
        assert_eq!(all.statistics().snapshots, 3);

        let c1 = Catalog::from_store_for_customer(&store, "C1", &KindSelector::default()).unwrap();
        assert_eq!(c1.customers().collect::<Vec<_>>(), vec!["C1"]);
        assert_eq!(c1.snapshot_times("C1", "111").len(), 2);
    }
}
