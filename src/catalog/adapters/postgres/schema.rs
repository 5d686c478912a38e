//! Diesel schema for catalog persistence.

diesel::table! {
    /// Registered tool-servers.
    catalog_servers (id) {
        /// Record identifier.
        id -> Uuid,
        /// Requesting user.
        #[max_length = 255]
        owner -> Varchar,
        /// Unique server name.
        #[max_length = 100]
        name -> Varchar,
        /// Serialized connection descriptor.
        transport -> Jsonb,
        /// Whether the server may be connected.
        enabled -> Bool,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}
