use rand::distributions::Alphanumeric;
use rand::Rng;

const KEY_LENGTH: usize = 32;

fn main() {
    let key: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect();
    println!("\nGenerated TOKEN_ENCRYPTION_KEY:\n\n{}\n\n", key);
}
