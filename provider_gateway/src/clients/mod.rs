//! Interfaces to the external collaborators the gateway orchestrates:
//! the asset directory (metadata catalog), the payment ledger, the compute
//! cluster and the document codec. The gateway only consumes these
//! services; their internals are out of scope.

pub mod asset_directory;
pub mod codec;
pub mod compute;
pub mod ledger;

pub use asset_directory::{Asset, AssetDirectoryClient, ServiceDescriptor};
pub use codec::{files_list_from_json, url_at_index, DocumentCodec, FileEntry, RemoteCodec};
pub use compute::{ComputeClusterClient, ComputeLimits};
pub use ledger::{HttpLedgerClient, LedgerClient};
