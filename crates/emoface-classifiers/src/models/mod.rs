pub mod adaboost;
pub mod classifier_trait;
pub mod cnn;
pub mod factory;
pub mod mlp;
pub mod nn;
pub mod svm;
