#![no_main]

use libfuzzer_sys::fuzz_target;
use xchain_lib::CertificateStore;

fuzz_target!(|data: &[u8]| {
    // Bundle loading skips bad entries; it must never panic.
    let Ok(store) = CertificateStore::from_pem(data) else {
        return;
    };
    for cert in store.iter() {
        assert!(store.contains(cert));
        assert!(store
            .certificates(cert.subject())
            .iter()
            .any(|c| c == cert));
    }
    assert_eq!(store.iter().count(), store.len());
});
