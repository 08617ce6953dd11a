pub mod test_peer_messages;
pub mod test_webrtc_loopback;
