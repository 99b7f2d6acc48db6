//! In-memory NFS version 2 server answering through [`MockServer`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use nfs_mamont_client::xdr::nfs2::{self, fattr, fhandle, ftype, nfsstat, webnfs};

use super::{attributes, handle, Call, MockServer, Reply};

pub struct FakeNode {
    pub attr: fattr,
    pub children: BTreeMap<String, fhandle>,
    pub data: Vec<u8>,
    pub target: String,
}

struct State {
    next_id: u8,
    nodes: HashMap<fhandle, FakeNode>,
    page_size: usize,
    required_flavor: Option<u32>,
    offered_flavors: Vec<u32>,
    silent: HashSet<u32>,
    stall_readdir: bool,
}

pub struct FakeNfs {
    state: Mutex<State>,
}

pub const ROOT: fhandle = fhandle::PUBLIC;

impl FakeNfs {
    /// An empty public directory with mtime 1000.
    pub fn new() -> Arc<Self> {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT, FakeNode::new(attributes(ftype::NFDIR, 1, 1000)));
        Arc::new(FakeNfs {
            state: Mutex::new(State {
                next_id: 2,
                nodes,
                page_size: 64,
                required_flavor: None,
                offered_flavors: Vec::new(),
                silent: HashSet::new(),
                stall_readdir: false,
            }),
        })
    }

    pub async fn serve(self: &Arc<Self>) -> MockServer {
        let fs = self.clone();
        MockServer::start(move |call| fs.answer(call)).await
    }

    fn add(&self, parent: &fhandle, name: &str, kind: ftype, data: &[u8], target: &str) -> fhandle {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        let fh = handle(id);
        let mut node = FakeNode::new(attributes(kind, id as u32, 1000));
        node.data = data.to_vec();
        node.attr.size = data.len() as u32;
        node.target = target.to_string();
        state.nodes.insert(fh, node);
        state.nodes.get_mut(parent).unwrap().children.insert(name.to_string(), fh);
        fh
    }

    pub fn add_dir(&self, parent: &fhandle, name: &str) -> fhandle {
        self.add(parent, name, ftype::NFDIR, &[], "")
    }

    pub fn add_file(&self, parent: &fhandle, name: &str, data: &[u8]) -> fhandle {
        self.add(parent, name, ftype::NFREG, data, "")
    }

    pub fn add_symlink(&self, parent: &fhandle, name: &str, target: &str) -> fhandle {
        self.add(parent, name, ftype::NFLNK, &[], target)
    }

    pub fn set_mtime(&self, fh: &fhandle, seconds: u32) {
        self.state.lock().unwrap().nodes.get_mut(fh).unwrap().attr.mtime.seconds = seconds;
    }

    pub fn data(&self, fh: &fhandle) -> Vec<u8> {
        self.state.lock().unwrap().nodes[fh].data.clone()
    }

    pub fn child(&self, dir: &fhandle, name: &str) -> Option<fhandle> {
        self.state.lock().unwrap().nodes[dir].children.get(name).copied()
    }

    pub fn set_page_size(&self, entries: usize) {
        self.state.lock().unwrap().page_size = entries;
    }

    /// READDIR answers with no entries and no end-of-directory flag.
    pub fn stall_readdir(&self) {
        self.state.lock().unwrap().stall_readdir = true;
    }

    /// Public LOOKUPs under any other flavor are refused as too weak, and
    /// negotiation offers `offered`.
    pub fn require_flavor(&self, flavor: u32, offered: Vec<u32>) {
        let mut state = self.state.lock().unwrap();
        state.required_flavor = Some(flavor);
        state.offered_flavors = offered;
    }

    pub fn silence(&self, procedure: u32) {
        self.state.lock().unwrap().silent.insert(procedure);
    }

    pub fn answer(&self, call: &Call) -> Reply {
        let mut state = self.state.lock().unwrap();
        if state.silent.contains(&call.procedure) {
            return Reply::Silent;
        }
        let mut args = call.args();
        match call.procedure {
            0 => Reply::Success(Vec::new()),
            1 => {
                let fh: fhandle = args.decode().unwrap();
                match state.nodes.get(&fh) {
                    Some(node) => Reply::nfs_ok(&node.attr),
                    None => Reply::nfs_err(nfsstat::NFSERR_STALE),
                }
            }
            2 => {
                let args: nfs2::sattrargs = args.decode().unwrap();
                let Some(node) = state.nodes.get_mut(&args.file) else {
                    return Reply::nfs_err(nfsstat::NFSERR_STALE);
                };
                if args.attributes.mode != nfs2::SATTR_UNSET {
                    node.attr.mode = (node.attr.mode & !0o7777) | args.attributes.mode;
                }
                if args.attributes.size != nfs2::SATTR_UNSET {
                    node.data.resize(args.attributes.size as usize, 0);
                    node.attr.size = args.attributes.size;
                }
                Reply::nfs_ok(&node.attr)
            }
            4 => {
                let args: nfs2::diropargs = args.decode().unwrap();
                if args.dir.is_public() && args.name.0.first() == Some(&webnfs::SEC_NEGOTIATE) {
                    let index = args.name.0[1] as usize;
                    let rest = state.offered_flavors.get(index.saturating_sub(1)..).unwrap_or(&[]);
                    let batch = &rest[..rest.len().min(webnfs::FLAVORS_PER_REPLY)];
                    let more = rest.len() > batch.len();
                    return Reply::nfs_ok(&nfs2::diropokres {
                        file: webnfs::pack_flavors(batch, more),
                        attributes: fattr::default(),
                    });
                }
                if let Some(flavor) = state.required_flavor {
                    if args.dir.is_public() && call.flavor() != flavor {
                        return Reply::too_weak();
                    }
                }
                let mut fh = args.dir;
                for component in args.name.to_string().split('/').filter(|c| !c.is_empty()) {
                    match state.nodes.get(&fh).and_then(|n| n.children.get(component)) {
                        Some(child) => fh = *child,
                        None => return Reply::nfs_err(nfsstat::NFSERR_NOENT),
                    }
                }
                Reply::nfs_ok(&nfs2::diropokres { file: fh, attributes: state.nodes[&fh].attr })
            }
            5 => {
                let fh: fhandle = args.decode().unwrap();
                Reply::nfs_ok(&nfs2::nfsstring::from(state.nodes[&fh].target.as_str()))
            }
            6 => {
                let args: nfs2::readargs = args.decode().unwrap();
                let node = &state.nodes[&args.file];
                let start = (args.offset as usize).min(node.data.len());
                let end = (start + args.count as usize).min(node.data.len());
                Reply::nfs_ok(&nfs2::readokres {
                    attributes: node.attr,
                    data: node.data[start..end].to_vec(),
                })
            }
            8 => {
                let args: nfs2::writeargs = args.decode().unwrap();
                let node = state.nodes.get_mut(&args.file).unwrap();
                let end = args.offset as usize + args.data.len();
                if node.data.len() < end {
                    node.data.resize(end, 0);
                }
                node.data[args.offset as usize..end].copy_from_slice(&args.data);
                node.attr.size = node.data.len() as u32;
                node.attr.mtime.seconds += 1;
                Reply::nfs_ok(&node.attr)
            }
            9 | 14 => {
                let args: nfs2::createargs = args.decode().unwrap();
                let name = args.place.name.to_string();
                if state.nodes[&args.place.dir].children.contains_key(&name) {
                    return Reply::nfs_err(nfsstat::NFSERR_EXIST);
                }
                let kind = if call.procedure == 9 { ftype::NFREG } else { ftype::NFDIR };
                drop(state);
                let fh = self.add(&args.place.dir, &name, kind, &[], "");
                let mut state = self.state.lock().unwrap();
                state.nodes.get_mut(&args.place.dir).unwrap().attr.mtime.seconds += 1;
                let node = state.nodes.get_mut(&fh).unwrap();
                node.attr.mode = (node.attr.mode & !0o7777) | (args.attributes.mode & 0o7777);
                Reply::nfs_ok(&nfs2::diropokres { file: fh, attributes: node.attr })
            }
            10 | 15 => {
                let args: nfs2::diropargs = args.decode().unwrap();
                let dir = state.nodes.get_mut(&args.dir).unwrap();
                match dir.children.remove(&args.name.to_string()) {
                    Some(fh) => {
                        dir.attr.mtime.seconds += 1;
                        state.nodes.remove(&fh);
                        Reply::nfs_ok(&())
                    }
                    None => Reply::nfs_err(nfsstat::NFSERR_NOENT),
                }
            }
            11 => {
                let args: nfs2::renameargs = args.decode().unwrap();
                let from = state.nodes.get_mut(&args.from.dir).unwrap();
                let Some(fh) = from.children.remove(&args.from.name.to_string()) else {
                    return Reply::nfs_err(nfsstat::NFSERR_NOENT);
                };
                from.attr.mtime.seconds += 1;
                let to = state.nodes.get_mut(&args.to.dir).unwrap();
                to.children.insert(args.to.name.to_string(), fh);
                to.attr.mtime.seconds += 1;
                Reply::nfs_ok(&())
            }
            12 => {
                let args: nfs2::linkargs = args.decode().unwrap();
                state.nodes.get_mut(&args.from).unwrap().attr.nlink += 1;
                let dir = state.nodes.get_mut(&args.to.dir).unwrap();
                dir.children.insert(args.to.name.to_string(), args.from);
                dir.attr.mtime.seconds += 1;
                Reply::nfs_ok(&())
            }
            13 => {
                let args: nfs2::symlinkargs = args.decode().unwrap();
                drop(state);
                let (name, target) = (args.from.name.to_string(), args.to.to_string());
                self.add(&args.from.dir, &name, ftype::NFLNK, &[], &target);
                let mut state = self.state.lock().unwrap();
                state.nodes.get_mut(&args.from.dir).unwrap().attr.mtime.seconds += 1;
                Reply::nfs_ok(&())
            }
            16 => {
                let args: nfs2::readdirargs = args.decode().unwrap();
                if state.stall_readdir {
                    return Reply::nfs_ok(&nfs2::readdirokres { entries: Vec::new(), eof: false });
                }
                let dir = &state.nodes[&args.dir];
                let fileid = |fh: &fhandle| state.nodes[fh].attr.fileid;
                let children = dir.children.iter().map(|(name, fh)| (name.clone(), fileid(fh)));
                let names: Vec<(String, u32)> =
                    [(".".to_string(), dir.attr.fileid), ("..".to_string(), 1)]
                        .into_iter()
                        .chain(children)
                        .collect();
                let start = u32::from_be_bytes(args.cookie) as usize;
                let end = (start + state.page_size).min(names.len());
                let entries = names[start.min(end)..end]
                    .iter()
                    .enumerate()
                    .map(|(i, (name, fileid))| nfs2::entry {
                        fileid: *fileid,
                        name: name.as_str().into(),
                        cookie: ((start + i + 1) as u32).to_be_bytes(),
                    })
                    .collect();
                Reply::nfs_ok(&nfs2::readdirokres { entries, eof: end == names.len() })
            }
            17 => Reply::nfs_ok(&nfs2::statfsokres {
                tsize: 8192,
                bsize: 4096,
                blocks: 1000,
                bfree: 500,
                bavail: 400,
            }),
            _ => Reply::Accepted(nfs_mamont_client::xdr::rpc::accept_body::PROC_UNAVAIL),
        }
    }
}

impl FakeNode {
    fn new(attr: fattr) -> Self {
        Self { attr, children: BTreeMap::new(), data: Vec::new(), target: String::new() }
    }
}
