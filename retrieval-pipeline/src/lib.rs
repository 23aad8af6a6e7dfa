pub mod answer_retrieval;
pub mod multi_retrieval;
pub mod store_cache;
pub mod vector_index;

pub use answer_retrieval::{QueryAnswer, QueryEngine};
pub use multi_retrieval::{MultiDocumentQueryEngine, MultiQueryAnswer};
pub use store_cache::{MaterialWriteGuard, StoreCache};
pub use vector_index::{validate_material_id, VectorIndex};
