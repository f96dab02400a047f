pub mod countdown;
pub mod reminder;
