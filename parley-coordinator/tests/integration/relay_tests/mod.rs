pub mod test_duplicate_delivery_is_processed_once;
