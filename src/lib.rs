pub mod appsettings;
pub mod clock;
pub mod console;
pub mod delivery;
pub mod models;
pub mod scheduling;
pub mod storage;
pub mod sync;
