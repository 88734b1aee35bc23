mod company;
mod context;
mod crud;
mod person;
mod time_record;

pub use company::{CompanyRules, CompanyService};
pub use context::UserContext;
pub use crud::{ensure_exists, Creator, CrudRules, CrudService, Deleter, Reader, Updater};
pub use person::{PersonRules, PersonService};
pub use time_record::TimeRecordService;
