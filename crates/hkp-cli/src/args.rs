use argh::FromArgs;

/// HKP - OpenPGP keyserver client
#[derive(FromArgs, Debug)]
pub struct Cli {
    /// keyserver to talk to, e.g. hkp://keys.example.org
    ///
    /// Falls back to the HKP_KEYSERVER environment variable, then to
    /// hkp://localhost.
    #[argh(option, short = 'k')]
    pub keyserver: Option<String>,

    /// seconds to wait for a server response (default 30)
    #[argh(option, long = "timeout-secs", default = "30")]
    pub timeout_secs: u64,

    /// number of HTTP redirects to follow (default 2)
    #[argh(option, long = "max-redirects", default = "2")]
    pub max_redirects: usize,

    #[argh(subcommand)]
    pub command: Commands,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum Commands {
    Search(SearchArgs),
    Get(GetArgs),
    Put(PutArgs),
    Hosts(HostsArgs),
    Schemes(SchemesArgs),
}

/// Arguments for searching the keyserver.
///
/// The output is the server's machine readable index listing, written to
/// stdout unchanged.
///
/// # Example
///
/// ```bash
/// hkp -k hkps://keys.example.org search '<alice@example.org>'
/// ```
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "search")]
/// search for keys
pub struct SearchArgs {
    /// user id fragment, mail address, key id or fingerprint
    #[argh(positional)]
    pub pattern: String,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "get")]
/// fetch keys by key id or fingerprint
pub struct GetArgs {
    /// key ids or v4 fingerprints, optionally prefixed with 0x
    #[argh(positional)]
    pub keyspecs: Vec<String>,
}

/// Arguments for uploading a key.
///
/// The input is binary (unarmored) key material; it is armored before
/// upload.
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "put")]
/// upload a key
pub struct PutArgs {
    /// file holding the key, or - for stdin
    #[argh(positional, default = "\"-\".into()")]
    pub file: String,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "hosts")]
/// resolve keyserver names and print the host table
pub struct HostsArgs {
    /// host or pool names to select
    #[argh(positional)]
    pub names: Vec<String>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "schemes")]
/// describe the handled URL schemes
pub struct SchemesArgs {
    /// keyserver URI to describe; lists the schemes when omitted
    #[argh(positional)]
    pub uri: Option<String>,
}
