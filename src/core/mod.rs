//! Core module - term resolution, traversal and similarity

pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod corpus;
pub mod identity;
pub mod remote;
pub mod resolver;
pub mod similarity;
pub mod stats;
pub mod store;
pub mod term;
pub mod traversal;

pub use cache::{CacheStats, ClearStats, Provenance, RelationKind, TermCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use context::Context;
pub use corpus::CorpusFrequencies;
pub use identity::{IdParseError, Ontology, TermId};
pub use remote::{OlsClient, RemoteError, RemoteErrorClass, RemoteLookup, RemoteSettings};
pub use resolver::Resolver;
pub use similarity::{SimilarityEngine, SimilarityError, SimilarityMethod};
pub use stats::{ResolverStats, StatsSnapshot};
pub use store::{InMemoryTermStore, TermStore};
pub use term::{Term, TermError};
pub use traversal::Traversal;
