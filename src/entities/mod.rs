// Entity Models
//
// Partner records carry the code whose two schemes we reconcile;
// invoice lines and headers reference partners by any variant of that code.

pub mod invoice;
pub mod partner;

pub use invoice::{InvHeader, InvLine, InvoiceStatus};
pub use partner::Partner;
