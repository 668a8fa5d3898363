//! CSV type inference and mapping to PostgreSQL column types.

mod csv_infer;
mod infer;
mod mapping;

pub use csv_infer::{decode_lossy, infer_arrow_schema, CsvReadOptions};
pub use infer::{
    qualified_name, quote_identifier, table_name_from_path, InferredColumn, InferredTableSchema,
};
pub use mapping::{SqlType, TypeMapper};
