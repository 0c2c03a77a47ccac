pub mod pipeline_model;
