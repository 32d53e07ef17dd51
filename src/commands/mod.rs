mod aggregate;
mod cache_cmd;
mod categories;
mod participants;
mod select;
mod table;
mod util;
mod villages;

pub use aggregate::Aggregate;
pub use cache_cmd::CacheCmd;
pub use categories::Categories;
pub use participants::Participants;
pub use select::Select;
pub use table::Table;
pub use util::{json_to_nu, nu_to_json};
pub use villages::Villages;
