pub mod run;
pub mod topology;
pub mod util;
