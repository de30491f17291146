//! Plain data types shared by the parser, the routing table and the strategies.

pub mod hop;
