//! Logical key layout shared by every coordination store backend.

/// Set of device ids registered for a user.
pub fn user_devices(user_id: &str) -> String {
    format!("user:{user_id}:devices")
}

/// Hash holding one device record.
pub fn user_device(user_id: &str, device_id: &str) -> String {
    format!("user:{user_id}:device:{device_id}")
}

/// Reverse mapping from a transport socket to its device id.
pub fn socket_device(socket_id: &str) -> String {
    format!("socket:{socket_id}:device")
}

/// Sorted set of device ids scored by last heartbeat.
pub fn user_heartbeats(user_id: &str) -> String {
    format!("user:{user_id}:heartbeats")
}

/// Serialized [`RolesState`](crate::state::roles::RolesState).
pub fn user_roles(user_id: &str) -> String {
    format!("user:{user_id}:roles")
}

/// Election lock resource.
pub fn user_roles_lock(user_id: &str) -> String {
    format!("user:{user_id}:roles:lock")
}

/// Cooldown marker damping reassignment.
pub fn user_roles_cooldown(user_id: &str) -> String {
    format!("user:{user_id}:roles:cooldown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_the_documented_layout() {
        assert_eq!(user_devices("u1"), "user:u1:devices");
        assert_eq!(user_device("u1", "d1"), "user:u1:device:d1");
        assert_eq!(socket_device("s1"), "socket:s1:device");
        assert_eq!(user_heartbeats("u1"), "user:u1:heartbeats");
        assert_eq!(user_roles("u1"), "user:u1:roles");
        assert_eq!(user_roles_lock("u1"), "user:u1:roles:lock");
        assert_eq!(user_roles_cooldown("u1"), "user:u1:roles:cooldown");
    }
}
