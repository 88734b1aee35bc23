mod company;
mod credential;
mod pagination;
mod person;
mod row_version;
mod time_record;

pub use company::*;
pub use credential::*;
pub use pagination::*;
pub use person::*;
pub use row_version::*;
pub use time_record::*;
