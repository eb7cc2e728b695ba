pub mod emotion;
