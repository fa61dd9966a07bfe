pub mod batch;
pub mod databases;
pub mod presets;
pub mod run;
pub mod tools;
