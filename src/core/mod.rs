pub mod histogram;
pub mod neighbourhood;
pub mod runtimes;
pub mod settings;
pub mod similarity_measure;
pub mod sub_matrix;
pub mod time_series;
