//! Cancellation from another thread.

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use prism_store::{RequestState, StoreError};

    use crate::{DESTINATION, StubObjectStore, client_for, stored_path, test_profile};

    const TRIALS: u64 = 12;

    #[test]
    fn test_should_end_cancelled_whenever_cancel_lands() {
        let stub = StubObjectStore::start(test_profile());
        let client = client_for(&stub, test_profile());
        stub.insert_object(&stored_path("held.jpg"), &[7; 4096]);
        stub.set_delay(Duration::from_millis(250));

        let body = vec![42_u8; 256 * 1024];
        for trial in 0..TRIALS {
            let mut request = client.create_request(DESTINATION).unwrap();
            let handle = request.cancel_handle();
            let after = Duration::from_millis((trial * 17) % 60);
            let canceller = thread::spawn(move || {
                thread::sleep(after);
                handle.cancel();
            });

            let mut out = Vec::new();
            let result = match trial % 4 {
                0 => request.get("held.jpg", &mut out),
                1 => request.put("cancelled.jpg", &body),
                2 => request.head("held.jpg"),
                _ => request.delete("held.jpg"),
            };
            canceller.join().unwrap();

            assert!(
                matches!(result, Err(StoreError::Cancelled)),
                "trial {trial}: {result:?}"
            );
            assert_eq!(request.state(), RequestState::Cancelled, "trial {trial}");
            assert!(request.response().is_none(), "trial {trial}");
            assert!(out.is_empty(), "trial {trial}");
            client.free_request(request);
        }
        assert_eq!(client.live_requests(), 0);
    }

    #[test]
    fn test_should_cancel_before_start_without_network() {
        let stub = StubObjectStore::start(test_profile());
        let client = client_for(&stub, test_profile());

        let mut request = client.create_request(DESTINATION).unwrap();
        request.cancel();
        assert!(matches!(
            request.put("early.jpg", b"data"),
            Err(StoreError::Cancelled)
        ));
        assert_eq!(request.state(), RequestState::Cancelled);
        assert!(stub.requests().is_empty());
    }

    #[test]
    fn test_should_return_promptly_after_cancel() {
        let stub = StubObjectStore::start(test_profile());
        let client = client_for(&stub, test_profile());
        stub.set_delay(Duration::from_millis(300));

        let mut request = client.create_request(DESTINATION).unwrap();
        let handle = request.cancel_handle();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.cancel();
        });

        let started = Instant::now();
        let result = request.head("slow.jpg");
        canceller.join().unwrap();

        assert!(matches!(result, Err(StoreError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_should_be_reusable_after_reset() {
        let stub = StubObjectStore::start(test_profile());
        let client = client_for(&stub, test_profile());

        let mut request = client.create_request(DESTINATION).unwrap();
        request.cancel();
        request.head("x.jpg").unwrap_err();
        assert_eq!(request.state(), RequestState::Cancelled);

        request.reset();
        assert_eq!(request.state(), RequestState::Idle);
        request.put("x.jpg", b"again").unwrap();
        assert_eq!(request.state(), RequestState::Complete);
        assert_eq!(stub.object(&stored_path("x.jpg")), Some(b"again".to_vec()));
    }
}
