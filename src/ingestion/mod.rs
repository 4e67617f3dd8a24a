pub mod rail;
