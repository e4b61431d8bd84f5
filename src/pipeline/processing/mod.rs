// Pipeline processing: join, decode, validate, correct, enrich and encode

pub mod color;
pub mod correct;
pub mod encode;
pub mod filter;
pub mod flags;
pub mod join;
pub mod normalize;
pub mod prune;

pub use color::{dominant_color, ImageColorExtractor};
pub use correct::NumericCorrector;
pub use encode::CategoricalEncoder;
pub use filter::RecordFilter;
pub use flags::DerivedFlagBuilder;
pub use join::TableJoiner;
pub use normalize::FieldNormalizer;
pub use prune::EmptyCategoryPruner;
