pub mod backup;
pub mod classes;
pub mod core;
pub mod marks;
pub mod pupils;
pub mod reports;
pub mod school;
pub mod settings;
pub mod subjects;
