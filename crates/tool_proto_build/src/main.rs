fn main() {
    std::env::set_var("OUT_DIR", "../api/proto/gen");
    prost_build::Config::new()
        .bytes(["."])
        .compile_protos(
            &[
                // Messages of the fetch protocol, plus the transaction
                // encoding carried in its responses
                "../api/proto/fetch.proto",
            ],
            &["../api/proto/"],
        )
        .expect("Failed to compile api protobuf protocol files");
}
