use proc_macro2::TokenStream;
use quote::quote;
use std::{env, fs, path::Path};

// GF(2⁸) primitive polynomial x⁸ + x⁴ + x³ + x² + 1.
const GF256_POLY: u16 = 0x11d;

fn main() {
    let mut exp = [0u8; 256];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    for j in 0..255 {
        exp[j] = x as u8;
        log[x as usize] = j as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= GF256_POLY;
        }
    }

    let out_dir = env::var("OUT_DIR").unwrap();
    let out_dir = Path::new(&out_dir);
    write_table(&out_dir.join("gf256_exp_table.rs"), &exp);
    write_table(&out_dir.join("gf256_log_table.rs"), &log);
    println!("cargo:rerun-if-changed=build.rs");
}

fn write_table(path: &Path, table: &[u8; 256]) {
    let entries = table.iter();
    let tokens: TokenStream = quote! { [ #( #entries ),* ] };
    fs::write(path, tokens.to_string()).unwrap();
}
