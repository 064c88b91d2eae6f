pub mod image_type;
pub mod output_format;
pub mod source_file;
pub mod upload;

pub use image_type::ImageType;
pub use output_format::OutputFormat;
pub use source_file::SourceFile;
pub use upload::{RecordUpdate, ThumbnailRecord, UploadDestination, UploadRecord};
