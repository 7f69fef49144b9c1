use std::env;

use dotenvy::dotenv;
use lib_utils::crypt;

fn main() {
    dotenv().ok();
    let args: Vec<String> = env::args().collect();
    let content = args.get(1).expect("No content to decrypt provided!");
    let key = env::var("TOKEN_ENCRYPTION_KEY").expect("TOKEN_ENCRYPTION_KEY is not set");
    let decrypted = crypt::decrypt(content, &key).unwrap();
    println!("\nDecrypted:\n\n{}\n\n", decrypted);
}
