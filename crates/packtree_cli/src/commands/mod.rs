pub mod audit;
pub mod collapse;
pub mod covers;
pub mod hierarchy;
pub mod import;
pub mod reconcile;
