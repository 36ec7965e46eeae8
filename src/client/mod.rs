mod remote;

pub use remote::RemoteCatalog;
