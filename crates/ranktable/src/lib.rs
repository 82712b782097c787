//! Ranktable: the computation model behind interactive ranking tables.
//!
//! A data set is shown as one or more rankings. Each ranking is an ordered
//! tree of columns that derive values from the rows: plain data columns,
//! support columns (rank, selection) and composites such as weighted sums
//! or scripts over their children. Changing a column's mapping, filter or
//! weights marks its ranking dirty; the data provider then resorts it.
//!
//! # Core Principles
//!
//! - **Rows are never modified**: columns only read them
//! - **One arena per provider**: the [`ColumnTree`] owns every column
//! - **Stale results are discarded**: each sort carries a generation ticket
//!
//! # Example
//!
//! ```
//! use ranktable::{ColumnDesc, DataProvider, LocalDataProvider};
//! use serde_json::json;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let rows = vec![json!({"name": "a", "score": 3}), json!({"name": "b", "score": 7})];
//!     let mut provider = LocalDataProvider::new(
//!         rows,
//!         vec![
//!             ColumnDesc::field("string", "name"),
//!             ColumnDesc::field("number", "score").with_domain([0.0, 10.0]),
//!         ],
//!     );
//!     let ranking = provider.core_mut().derive_default();
//!     provider.flush().await.unwrap();
//!     let order = provider.core().tree().ranking(ranking).unwrap().order();
//!     assert_eq!(&*order, &[0, 1]);
//! });
//! # }
//! ```

pub mod column;
pub mod config;
pub mod error;
pub mod event;
pub mod formula;
pub mod group;
pub mod mapping;
pub mod provider;
pub mod ranking;
pub mod registry;
pub mod tree;

pub use column::{Column, ColumnDesc, ColumnId, ColumnKind, DataRow, Parent};
pub use config::{ExportOptions, ProviderConfig};
pub use error::{RankTableError, Result};
pub use event::{Event, EventDispatcher, EventKind, Source};
pub use group::{Group, OrderedGroup};
pub use mapping::MappingFunction;
pub use provider::{DataProvider, LocalDataProvider, ProviderCore, ProviderDump, RemoteDataProvider};
pub use ranking::{Ranking, RankingId};
pub use tree::ColumnTree;
