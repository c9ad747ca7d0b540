pub mod permission;

pub use permission::CurrentMember;
