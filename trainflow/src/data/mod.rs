//! Tabular data: the in-memory table, CSV and matrix persistence, record
//! sources and the train/test split.

pub mod array;
pub mod csv;
mod source;
mod split;
mod table;

pub use array::{append_label_column, load_array, save_array, split_label_column};
pub use csv::{read_csv, write_csv};
pub use source::{
    CollectionSource, DocumentStore, InMemoryRecordSource, RecordSource, DOCUMENT_ID_COLUMN,
};
#[cfg(test)]
pub use source::MockRecordSource;
pub use split::{test_row_count, train_test_split};
pub use table::{Cell, Table};
