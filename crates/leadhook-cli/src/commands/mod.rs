pub mod leads;
pub mod serve;
pub mod status;
