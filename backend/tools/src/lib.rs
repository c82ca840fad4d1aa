pub mod capture_info;
pub mod read_file;

pub use capture_info::CaptureInfoTool;
pub use read_file::ReadFileTool;
