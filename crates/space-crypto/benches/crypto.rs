use space_crypto::{
    decrypt_record, encrypt_record, find_grant, generate_content_key, open, seal, Acl, KeyPair,
};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn xchacha_seal(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    let key = generate_content_key();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| seal(&key, b"alice", divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn xchacha_open(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    let key = generate_content_key();
    let sealed = seal(&key, b"alice", &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| open(&key, b"alice", divan::black_box(&sealed)).unwrap());
}

/// Cost of one record write grows with ACL size (one age wrap per member).
#[divan::bench(args = [1, 2, 8])]
fn encrypt_record_members(bencher: divan::Bencher, members: usize) {
    let owner = KeyPair::generate();
    let mut acl = Acl::new("owner", owner.public_key());
    for i in 1..members {
        acl = acl.with_member(format!("member-{i}"), KeyPair::generate().public_key());
    }
    let data = make_data(4096);
    bencher.bench(|| encrypt_record(divan::black_box(&data), &acl, b"aad").unwrap());
}

#[divan::bench]
fn decrypt_record_owner(bencher: divan::Bencher) {
    let owner = KeyPair::generate();
    let acl = Acl::new("owner", owner.public_key());
    let out = encrypt_record(&make_data(4096), &acl, b"aad").unwrap();
    let grant = find_grant(&out.access, "owner").unwrap().clone();
    bencher.bench(|| {
        decrypt_record(
            divan::black_box(&out.ciphertext),
            &grant.wrapped_key,
            &owner,
            b"aad",
        )
        .unwrap()
    });
}

#[divan::bench]
fn verify_signature(bencher: divan::Bencher) {
    let pair = KeyPair::generate();
    let verify_key = pair.verify_key();
    let signature = pair.sign(b"record digest");
    bencher.bench(|| {
        verify_key
            .verify(divan::black_box(b"record digest"), &signature)
            .unwrap()
    });
}

fn main() {
    divan::main();
}
