//! ABI bindings for the two deployed sale contracts.

use alloy_sol_types::sol;

sol! {
    /// Registry of addresses allowed into the presale.
    interface IWhitelist {
        function whitelistedAddresses(address account) external view returns (bool);
        function numAddressesWhitelisted() external view returns (uint8);
        function addAddressToWhitelist() external;
    }

    /// The NFT collection and its sale.
    interface ICryptoDevs {
        function owner() external view returns (address);
        function presaleStarted() external view returns (bool);
        /// Unix seconds at which the presale window closes.
        function presaleTimeEnded() external view returns (uint256);
        function tokenIds() external view returns (uint256);
        function presaleMint() external payable;
        function mint() external payable;
        function startPresale() external;
    }
}
